pub mod fetch_service;
pub mod return_service;
pub mod chart_service;
pub mod mortgage_service;
