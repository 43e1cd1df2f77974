#[cfg(not(target_os = "linux"))]
std::compile_error!("linux is the only target os that was tested");

pub mod error;
pub mod logger;
pub mod range;
pub mod report;
pub mod scan;
pub mod signal;

/// Raw ICMP sockets are only available to root.
pub fn is_user_sudo() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}
