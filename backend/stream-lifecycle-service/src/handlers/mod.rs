pub mod health;
pub mod streams;

pub use health::{all_active_health, get_health, health_check, update_health};
pub use streams::{
    create_stream, end_stream, get_stream_by_key, regenerate_stream_key, start_stream,
    update_stream, update_viewer_count,
};
