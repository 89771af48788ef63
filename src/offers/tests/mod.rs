mod common;
mod lifecycle;
mod tokens;
