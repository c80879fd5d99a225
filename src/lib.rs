//! Header bidding 代理：bidder 适配器契约、Richaudience 与 Sharethrough 适配器，
//! 以及把它们串起来的最小拍卖宿主。

pub mod api;
pub mod bidder;
pub mod bidding;
pub mod config;
pub mod logging;
pub mod openrtb;
