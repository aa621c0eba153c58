pub mod amqp;
pub mod desktop;
pub mod fmn;
pub mod health;
