pub mod card;
pub mod error;
pub mod gateway;
pub mod money;
pub mod multi_response;
pub mod response;
