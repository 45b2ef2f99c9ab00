//! Development helpers.

use std::fmt::Debug;

/// Pretty-print a value to stderr.
pub fn dump<T: Debug + ?Sized>(value: &T) {
    eprintln!("{:#?}", value);
}

/// Dump every argument, then exit the process.
#[macro_export]
macro_rules! dd {
    ($($value:expr),* $(,)?) => {{
        $($crate::develop::dump(&$value);)*
        ::std::process::exit(0)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_accepts_unsized() {
        dump("plain str");
        dump(&[1, 2, 3][..]);
    }
}
