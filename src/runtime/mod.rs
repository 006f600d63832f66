pub mod blueprint;
pub mod context;
pub mod engine;
pub mod nid;
pub mod pool;
pub mod redis_storage;
pub mod scope;
pub mod storage;
pub mod task;
pub mod workitem;
