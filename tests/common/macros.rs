#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(err) => panic!("Expected Ok(_), got Err({:?})", err),
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        match $expr {
            Ok(val) => val,
            Err(err) => panic!(concat!("Expected Ok(_): ", $($arg)+, ": {:?}"), err),
        }
    };
}

#[macro_export]
macro_rules! assert_err {
    ($expr:expr, $pattern:pat) => {
        match $expr {
            Err($pattern) => {}
            Err(other) => panic!("Unexpected error variant: {:?}", other),
            Ok(_) => panic!("Expected Err(_), got Ok(_)"),
        }
    };
}
