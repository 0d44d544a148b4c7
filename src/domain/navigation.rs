// Views the host should navigate to after a gate decision or account action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    Home,
    SignIn,
    Chat,
}

impl Destination {
    pub fn path(self) -> &'static str {
        match self {
            Destination::Home => "/",
            Destination::SignIn => "/login",
            Destination::Chat => "/chat",
        }
    }
}
