mod record_list;
mod rows;

pub use record_list::RecordListView;
