mod java_adapter;

pub use java_adapter::JavaAdapter;
