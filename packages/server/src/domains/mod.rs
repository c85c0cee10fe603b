// Business domains
pub mod dispatch;
pub mod presence;
