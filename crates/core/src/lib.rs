pub mod config;
pub mod domain;
pub mod errors;
pub mod ordering;
pub mod render;

pub use domain::importance::Importance;
pub use domain::item::{
    assignees_key, is_assignees_key, mention, mention_list, normalize_name, AgendaItem, ItemField,
    ItemFields, UpdateValue, ASSIGNEES_SUFFIX,
};
pub use errors::{AgendaError, ApplicationError, InterfaceError};
pub use ordering::{compare_items, sort_items};
pub use render::{render_agenda, AgendaColor, AgendaEntry, AgendaView};
