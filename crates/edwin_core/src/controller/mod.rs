//! crates/edwin_core/src/controller/mod.rs
//!
//! The panel controllers. Each one owns a slice of the panel, talks to the
//! backend through `ClientState` and renders through `PanelView`.

pub mod chat;
pub mod control;
pub mod explain;
pub mod materials;
pub mod panel;
pub mod progress;
pub mod quiz;
pub mod settings;

pub use chat::ChatController;
pub use explain::ExplainController;
pub use materials::MaterialsController;
pub use panel::{PageLoad, Panel};
pub use progress::ProgressController;
pub use quiz::{CatalogueEntry, QuizController, QuizSession};
pub use settings::SettingsController;
