mod common;
mod desktop_tests;
mod notification_queue_tests;
mod processor_tests;
