pub mod local;
pub mod remote;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use local::{LocalModelBackend, Model, ModelLoader};
pub use remote::{RemoteServiceBackend, RemoteServiceConfig};
pub use stub::{StubLoader, StubModel};

#[cfg(feature = "backend-tract")]
pub use tract::{TractLoader, TractModel, COCO_LABELS};
