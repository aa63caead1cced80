pub use enclose::*;

#[macro_export]
macro_rules! formula {
    (( $($d_tt:tt)* ) $cx:ident => $($b:tt)*) => {
        $crate::Formula::new($crate::macros::enclose!(($( $d_tt )*) Box::new(move |$cx: &$crate::Evaluation| { $($b)* })))
    };
    ($cx:ident => $($b:tt)*) => {
        $crate::Formula::new(Box::new(move |$cx: &$crate::Evaluation| { $($b)* }))
    };
}

#[macro_export]
macro_rules! try_formula {
    (( $($d_tt:tt)* ) $cx:ident => $($b:tt)*) => {
        $crate::Formula::fallible($crate::macros::enclose!(($( $d_tt )*) Box::new(move |$cx: &$crate::Evaluation| { $($b)* })))
    };
    ($cx:ident => $($b:tt)*) => {
        $crate::Formula::fallible(Box::new(move |$cx: &$crate::Evaluation| { $($b)* }))
    };
}

#[macro_export]
macro_rules! fault {
    ($($arg:tt)*) => {
        $crate::Fault::new(format!($($arg)*))
    };
}
