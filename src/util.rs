pub(crate) use buf::*;

mod buf;
