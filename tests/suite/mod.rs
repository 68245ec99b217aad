mod common;
mod symbolize;
