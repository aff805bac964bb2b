mod common;

mod join;
