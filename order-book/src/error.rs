use thiserror::Error;

use crate::types::OrderId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("Order quantity must be positive")]
    ZeroQuantity,

    #[error("Limit price must be positive for order {0}")]
    ZeroPrice(OrderId),

    #[error("Order id {0} is already resting in the book")]
    DuplicateOrder(OrderId),

    #[error("Unknown order: {0}")]
    UnknownOrder(OrderId),
}

pub type Result<T> = std::result::Result<T, BookError>;
