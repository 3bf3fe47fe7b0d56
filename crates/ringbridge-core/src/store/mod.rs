// ── Device store ──
//
// Concurrent storage of routed device handles.

mod registry;

pub use registry::DeviceRegistry;
