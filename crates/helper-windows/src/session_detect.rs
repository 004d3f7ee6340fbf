//! Console run or service run.
//!
//! A process started from a logon session carries the Interactive group in
//! its token; one started by the service manager carries the Service group.
//! The first of the two found in the token's group list decides.

use tracing::debug;
use windows::Win32::Foundation::{CloseHandle, HANDLE, PSID};
use windows::Win32::Security::{
    CreateWellKnownSid, EqualSid, GetTokenInformation, TokenGroups, WinInteractiveSid,
    WinServiceSid, TOKEN_GROUPS, TOKEN_QUERY, WELL_KNOWN_SID_TYPE,
};
use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

// SECURITY_MAX_SID_SIZE, in u32 words (SIDs are 4-byte aligned)
const SID_WORDS: usize = 68 / 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Interactive,
    Service,
    Other,
}

fn decide(groups: impl IntoIterator<Item = Membership>) -> bool {
    groups
        .into_iter()
        .find(|m| *m != Membership::Other)
        .map_or(false, |m| m == Membership::Interactive)
}

/// True if the process was started from an interactive logon session rather
/// than by the service manager. Any failure reading the token counts as a
/// service run.
pub fn is_interactive_session() -> bool {
    match token_memberships() {
        Ok(groups) => decide(groups),
        Err(e) => {
            debug!("cannot read process token groups, assuming service run: {}", e);
            false
        }
    }
}

struct Token(HANDLE);

impl Drop for Token {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

fn well_known_sid(kind: WELL_KNOWN_SID_TYPE) -> windows::core::Result<[u32; SID_WORDS]> {
    let mut sid = [0u32; SID_WORDS];
    let mut size = (SID_WORDS * 4) as u32;
    unsafe {
        CreateWellKnownSid(kind, PSID::default(), PSID(sid.as_mut_ptr().cast()), &mut size)?;
    }
    Ok(sid)
}

fn token_memberships() -> windows::core::Result<Vec<Membership>> {
    let mut interactive_sid = well_known_sid(WinInteractiveSid)?;
    let mut service_sid = well_known_sid(WinServiceSid)?;

    let token = unsafe {
        let mut handle = HANDLE::default();
        OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut handle)?;
        Token(handle)
    };

    // The first call only reports the size
    let mut len = 0u32;
    let _ = unsafe { GetTokenInformation(token.0, TokenGroups, None, 0, &mut len) };
    let mut buf = vec![0u64; (len as usize).div_ceil(8)];
    unsafe {
        GetTokenInformation(
            token.0,
            TokenGroups,
            Some(buf.as_mut_ptr().cast()),
            (buf.len() * 8) as u32,
            &mut len,
        )?;
    }

    let groups = unsafe {
        let header = &*(buf.as_ptr() as *const TOKEN_GROUPS);
        std::slice::from_raw_parts(header.Groups.as_ptr(), header.GroupCount as usize)
    };

    let interactive = PSID(interactive_sid.as_mut_ptr().cast());
    let service = PSID(service_sid.as_mut_ptr().cast());
    Ok(groups
        .iter()
        .map(|group| unsafe {
            if EqualSid(group.Sid, interactive).is_ok() {
                Membership::Interactive
            } else if EqualSid(group.Sid, service).is_ok() {
                Membership::Service
            } else {
                Membership::Other
            }
        })
        .collect())
}
