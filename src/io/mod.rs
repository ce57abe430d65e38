// io/mod.rs
// 配置、命令行与资源加载
pub mod config_loader;
pub mod obj_loader;
pub mod render_settings;
pub mod simple_cli;
