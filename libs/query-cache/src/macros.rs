#[macro_export]
macro_rules! query_key {
    ($name:ident::<$t:ty> => [$($seg:literal),+]) => {
        #[doc=concat!("Typed query-key binding \n ## Key \n ", stringify!([$($seg),+]), concat!("\n ## Value Type \n ", stringify!($t)))]
        pub struct $name;

        impl $crate::binding::QueryBinding for $name {
            type Value = $t;
            type Args<'r> = ();

            fn key(&self, _: Self::Args<'_>) -> $crate::key::QueryKey {
                $crate::key::QueryKey::of([$($seg),+])
            }
        }
    };
    ($name:ident::<$t:ty> => [$($seg:literal),+][$($arg:ident: $ty:ident),+]) => {
        #[doc=concat!("Typed query-key binding \n ## Key \n ", stringify!([$($seg),+][$($arg),+]), concat!("\n ## Value Type \n ", stringify!($t)))]
        pub struct $name;

        impl $crate::binding::QueryBinding for $name {
            type Value = $t;
            type Args<'r> = ($(&'r $ty,)+);

            fn key(&self, args: Self::Args<'_>) -> $crate::key::QueryKey {
                let ($($arg,)+) = args;
                let key = $crate::key::QueryKey::of([$($seg),+]);
                $(let key = key.text($arg.to_string());)+
                key
            }
        }
    };
}
