pub mod db_mail_item;
pub mod mail_item;

pub use mail_item::{
  ADDRESS_SEPARATOR, DATE_FORMAT, MailItem, format_date, join_addresses, split_addresses,
};
