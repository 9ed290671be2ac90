//! Live views over a [`live_sync_core::Database`].
//!
//! A view turns each commit into row-level events by re-running its
//! statement narrowed to the changed rows. Views may feed parameters of
//! other views, forming dependency chains maintained per commit.

pub mod config;
pub mod definition;
pub mod dynamic_param;
pub mod dynamic_view;
pub mod dynamic_view_set;
pub mod narrowing;

pub use config::ViewSetConfig;
pub use definition::ViewDefinition;
pub use dynamic_param::{DynamicParam, ParamId, ParamKind};
pub use dynamic_view::{DynamicView, ViewId, ViewState};
pub use dynamic_view_set::{DynamicViewSet, ViewSetHandle, ViewSink};
