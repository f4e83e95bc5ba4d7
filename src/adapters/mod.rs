// Adapters layer: 對外部系統 (後端 REST API) 的具體實作

pub mod cookies;
pub mod http;
