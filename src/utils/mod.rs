// utils/mod.rs
// 图像输出
pub mod save_utils;
