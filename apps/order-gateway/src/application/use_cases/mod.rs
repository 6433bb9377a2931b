//! Application Use Cases

mod submit_order;

pub use submit_order::SubmitOrderUseCase;
