pub mod mail_search;

pub use mail_search::MailSearch;
