pub mod expression;
pub mod flow;
pub mod participant;
pub mod reserve;
