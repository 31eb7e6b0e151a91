mod download_test;
mod health_test;
mod helpers;
