mod properties;

pub use properties::LockProperties;
