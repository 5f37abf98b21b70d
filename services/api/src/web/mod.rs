pub mod rest;
pub mod state;

// Re-export the REST handlers to make them easily accessible to the binary
// that builds the web server router.
pub use rest::{
    delete_course_handler, generate_course_handler, get_course_handler, list_courses_handler,
};
