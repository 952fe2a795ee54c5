//! Data-Driven Decaf 公共模块
//!
//! 提供服务共用的配置加载、错误类型、数据模型与中间件。

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
