pub mod components;
pub mod debounce;
pub mod renderfns;
pub mod view;
pub mod views;
pub mod virtual_list;
