// Output formatting — terminal display for analysis reports.

pub mod terminal;
