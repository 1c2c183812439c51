//! Root application component with routing and context providers.

use leptos::prelude::*;
use leptos_meta::{MetaTags, Stylesheet, Title, provide_meta_context};
use leptos_router::{
    ParamSegment, StaticSegment,
    components::{Route, Router, Routes},
};

use crate::net::types::{Frame, PageData};
use crate::pages::{chat::ChatPage, home::HomePage, login::LoginPage};
use crate::state::{auth::AuthState, chat::ChatState, chats::ChatsState, connection::ConnectionState};
use crate::util::payload::{PAGE_DATA_ELEMENT_ID, encode_page_data, read_embedded_page_data};

/// HTML shell rendered on the server for SSR + hydration.
pub fn shell(options: LeptosOptions) -> impl IntoView {
    view! {
        <!DOCTYPE html>
        <html lang="en">
            <head>
                <meta charset="utf-8"/>
                <meta name="viewport" content="width=device-width, initial-scale=1"/>
                <AutoReload options=options.clone()/>
                <HydrationScripts options/>
                <MetaTags/>
            </head>
            <body>
                <App/>
            </body>
        </html>
    }
}

/// Outbound half of the websocket, shared through context.
///
/// Empty on the server and before the frame client starts; sends then
/// report `false`.
#[derive(Clone, Default)]
pub struct FrameSender {
    #[cfg(feature = "hydrate")]
    tx: Option<futures::channel::mpsc::UnboundedSender<Vec<u8>>>,
}

impl FrameSender {
    #[cfg(feature = "hydrate")]
    pub fn new(tx: futures::channel::mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Queue a frame for the server. Fire-and-forget: replies arrive through
    /// the frame client's dispatch.
    pub fn send(&self, frame: &Frame) -> bool {
        #[cfg(feature = "hydrate")]
        {
            self.tx
                .as_ref()
                .is_some_and(|tx| crate::net::frame_client::send_frame(tx, frame))
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = frame;
            false
        }
    }
}

/// Root application component.
///
/// Seeds state from the page data the server resolved for this request
/// (provided as context during SSR, read back from the embedded script when
/// hydrating), provides every shared state context, and sets up routing.
#[component]
pub fn App() -> impl IntoView {
    provide_meta_context();

    let page_data = use_context::<PageData>().unwrap_or_else(read_embedded_page_data);
    let me = page_data.viewer.as_ref().map(|u| u.email.clone());

    let auth = RwSignal::new(AuthState::from_viewer(page_data.viewer.clone()));
    let connection = RwSignal::new(ConnectionState::default());
    let chat = RwSignal::new(
        page_data
            .conversation
            .as_ref()
            .map(|payload| ChatState::open(payload, me.as_deref()))
            .unwrap_or_default(),
    );
    let chats = RwSignal::new(ChatsState::default());
    let sender = RwSignal::new(FrameSender::default());

    provide_context(auth);
    provide_context(connection);
    provide_context(chat);
    provide_context(chats);
    provide_context(sender);
    provide_context(page_data.clone());

    #[cfg(feature = "hydrate")]
    {
        if me.is_some() {
            let tx = crate::net::frame_client::spawn_frame_client(connection, chat);
            sender.set(FrameSender::new(tx));
        }
    }

    let embedded = encode_page_data(&page_data);

    view! {
        <Stylesheet id="leptos" href="/pkg/chatroom.css"/>
        <Title text="Chatroom"/>
        <script id=PAGE_DATA_ELEMENT_ID type="application/json" inner_html=embedded></script>

        <Router>
            <Routes fallback=|| "Page not found.".into_view()>
                <Route path=StaticSegment("login") view=LoginPage/>
                <Route path=StaticSegment("") view=HomePage/>
                <Route path=(StaticSegment("chat"), ParamSegment("id")) view=ChatPage/>
            </Routes>
        </Router>
    }
}
