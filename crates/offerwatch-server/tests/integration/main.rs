mod api_tests;
mod common;
mod webhook_tests;
