//! mmap-backed reservation for the stack arena

use gvcsp_core::MemoryError;

fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

pub(super) fn page_size() -> usize {
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page <= 0 {
        4096
    } else {
        page as usize
    }
}

/// Reserve address space with no access; pages are committed on first touch
/// after `make_accessible`.
pub(super) fn reserve(len: usize) -> Result<*mut u8, MemoryError> {
    let base = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_NONE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
            -1,
            0,
        )
    };
    if base == libc::MAP_FAILED {
        return Err(MemoryError::ReserveFailed(errno()));
    }
    Ok(base as *mut u8)
}

pub(super) fn make_accessible(addr: *mut u8, len: usize) -> Result<(), MemoryError> {
    let ret = unsafe {
        libc::mprotect(addr as *mut libc::c_void, len, libc::PROT_READ | libc::PROT_WRITE)
    };
    if ret != 0 {
        return Err(MemoryError::ProtectionFailed(errno()));
    }
    Ok(())
}

/// Drop the physical pages behind `addr..addr+len`; they read back as zero.
pub(super) fn discard(addr: *mut u8, len: usize) -> Result<(), MemoryError> {
    let ret = unsafe { libc::madvise(addr as *mut libc::c_void, len, libc::MADV_DONTNEED) };
    if ret != 0 {
        return Err(MemoryError::AdviseFailed(errno()));
    }
    Ok(())
}

pub(super) fn unreserve(addr: *mut u8, len: usize) -> Result<(), MemoryError> {
    if addr.is_null() || len == 0 {
        return Ok(());
    }
    let ret = unsafe { libc::munmap(addr as *mut libc::c_void, len) };
    if ret != 0 {
        return Err(MemoryError::ReserveFailed(errno()));
    }
    Ok(())
}
