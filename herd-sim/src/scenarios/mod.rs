pub mod herd_demo;
