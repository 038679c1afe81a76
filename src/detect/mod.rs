mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{BackendError, DetectionBackend};
pub use backends::{
    LocalModelBackend, Model, ModelLoader, RemoteServiceBackend, RemoteServiceConfig, StubLoader,
};
pub(crate) use backends::remote::service_url;
pub use registry::{BackendRegistry, SharedBackend};
pub use result::{BoundingBox, Detection, DetectionResult};
