//! FFI declarations for CoreFoundation, Accessibility and CGEvent taps
//!
//! Only the calls the window locator and the hotkey tap need. Attribute names
//! are built with `core_foundation::string::CFString` so they release
//! themselves.

use core_foundation::base::TCFType;
use core_foundation::string::CFString;
use libc::c_void;
use std::ptr;

pub const K_CF_STRING_ENCODING_UTF8: u32 = 0x08000100;

pub type CFStringRef = *mut c_void;
pub type AXUIElementRef = *mut c_void;

pub const K_AX_ERROR_SUCCESS: i32 = 0;

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    pub fn CFRelease(cf: *mut c_void);
    pub fn CFStringGetCString(
        the_string: *mut c_void,
        buffer: *mut u8,
        buffer_size: isize,
        encoding: u32,
    ) -> bool;
    pub fn CFStringGetLength(the_string: *mut c_void) -> isize;
    pub fn CFArrayGetCount(the_array: *mut c_void) -> isize;
    pub fn CFArrayGetValueAtIndex(the_array: *mut c_void, idx: isize) -> *mut c_void;
    pub fn CFGetTypeID(cf: *mut c_void) -> usize;
    pub fn CFStringGetTypeID() -> usize;
    pub fn CFBooleanGetTypeID() -> usize;
    pub fn CFBooleanGetValue(boolean: *mut c_void) -> bool;

    pub fn CFMachPortCreateRunLoopSource(
        allocator: *mut c_void,
        port: *mut c_void,
        order: i64,
    ) -> *mut c_void;
    pub fn CFRunLoopGetCurrent() -> *mut c_void;
    pub fn CFRunLoopAddSource(rl: *mut c_void, source: *mut c_void, mode: *mut c_void);
    pub fn CFRunLoopRun();

    pub static kCFRunLoopCommonModes: *mut c_void;
}

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    pub fn AXUIElementCreateApplication(pid: i32) -> AXUIElementRef;
    pub fn AXUIElementCopyAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: *mut *mut c_void,
    ) -> i32;
    pub fn AXUIElementSetAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: *const c_void,
    ) -> i32;
    pub fn AXUIElementPerformAction(element: AXUIElementRef, action: CFStringRef) -> i32;
    pub fn AXIsProcessTrusted() -> bool;
}

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    pub fn CGEventGetIntegerValueField(event: *mut c_void, field: u32) -> i64;
    pub fn CGEventGetFlags(event: *mut c_void) -> u64;
    pub fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: unsafe extern "C" fn(*mut c_void, u32, *mut c_void, *mut c_void) -> *mut c_void,
        refcon: *mut c_void,
    ) -> *mut c_void;
    pub fn CGEventTapEnable(tap: *mut c_void, enable: bool);
}

// ============================================================================
// Helpers
// ============================================================================

/// Owned AXUIElementRef, released on drop
pub struct AxElement(AXUIElementRef);

impl AxElement {
    /// Take ownership of a +1 reference
    ///
    /// # Safety
    /// `element` must be null or a retained AXUIElementRef.
    pub unsafe fn from_owned(element: AXUIElementRef) -> Option<Self> {
        if element.is_null() { None } else { Some(Self(element)) }
    }

    pub fn application(pid: i32) -> Option<Self> {
        unsafe { Self::from_owned(AXUIElementCreateApplication(pid)) }
    }

    /// Copy an attribute; the returned value is owned by the caller
    pub fn copy_attr(&self, name: &str) -> Option<*mut c_void> {
        let attr = CFString::new(name);
        let mut value: *mut c_void = ptr::null_mut();
        let result = unsafe {
            AXUIElementCopyAttributeValue(
                self.0,
                attr.as_concrete_TypeRef() as CFStringRef,
                &mut value,
            )
        };
        if result != K_AX_ERROR_SUCCESS || value.is_null() {
            return None;
        }
        Some(value)
    }

    pub fn string_attr(&self, name: &str) -> Option<String> {
        let value = self.copy_attr(name)?;
        unsafe {
            let text = cfstring_to_string(value);
            CFRelease(value);
            text
        }
    }

    pub fn bool_attr(&self, name: &str) -> Option<bool> {
        let value = self.copy_attr(name)?;
        unsafe {
            let flag = if CFGetTypeID(value) == CFBooleanGetTypeID() {
                Some(CFBooleanGetValue(value))
            } else {
                None
            };
            CFRelease(value);
            flag
        }
    }

    pub fn element_attr(&self, name: &str) -> Option<AxElement> {
        let value = self.copy_attr(name)?;
        unsafe { Self::from_owned(value as AXUIElementRef) }
    }

    /// Children of an array-valued attribute such as `AXWindows`
    pub fn element_list_attr(&self, name: &str) -> Vec<AxElement> {
        let Some(array) = self.copy_attr(name) else {
            return Vec::new();
        };
        let mut elements = Vec::new();
        unsafe {
            for i in 0..CFArrayGetCount(array) {
                let item = CFArrayGetValueAtIndex(array, i);
                if !item.is_null() {
                    // Items are borrowed from the array; retain before it goes away
                    core_foundation::base::CFRetain(item as *const c_void);
                    elements.push(AxElement(item));
                }
            }
            CFRelease(array);
        }
        elements
    }

    pub fn set_bool_attr(&self, name: &str, value: bool) -> bool {
        let attr = CFString::new(name);
        let flag = if value {
            core_foundation::boolean::CFBoolean::true_value()
        } else {
            core_foundation::boolean::CFBoolean::false_value()
        };
        unsafe {
            AXUIElementSetAttributeValue(
                self.0,
                attr.as_concrete_TypeRef() as CFStringRef,
                flag.as_CFTypeRef(),
            ) == K_AX_ERROR_SUCCESS
        }
    }

    pub fn perform(&self, action: &str) -> bool {
        let action = CFString::new(action);
        unsafe {
            AXUIElementPerformAction(self.0, action.as_concrete_TypeRef() as CFStringRef)
                == K_AX_ERROR_SUCCESS
        }
    }
}

impl Drop for AxElement {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0) }
    }
}

/// Convert a CFString to a Rust String; None for null or non-string values
///
/// # Safety
/// `cfstring` must be null or a valid CoreFoundation object.
pub unsafe fn cfstring_to_string(cfstring: *mut c_void) -> Option<String> {
    unsafe {
        if cfstring.is_null() || CFGetTypeID(cfstring) != CFStringGetTypeID() {
            return None;
        }

        let length = CFStringGetLength(cfstring);
        if length == 0 {
            return Some(String::new());
        }

        // UTF-8 needs up to 4 bytes per UTF-16 unit, plus the terminator
        let buffer_size = (length * 4 + 1) as usize;
        let mut buffer = vec![0u8; buffer_size];

        if !CFStringGetCString(
            cfstring,
            buffer.as_mut_ptr(),
            buffer_size as isize,
            K_CF_STRING_ENCODING_UTF8,
        ) {
            return None;
        }

        let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
        String::from_utf8(buffer[..end].to_vec()).ok()
    }
}
