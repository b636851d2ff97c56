pub mod dat;
pub mod parquet;
