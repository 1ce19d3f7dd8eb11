pub mod m202608250001_create_attendance;
