pub mod flow_mutex;
pub mod registry;
