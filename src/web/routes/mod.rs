pub mod channel_routes;
pub mod zapi_routes;
