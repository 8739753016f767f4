use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Movie Night Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::event_stream,
        crate::routes::session::current_session,
        crate::routes::session::sign_in,
        crate::routes::session::sign_out,
        crate::routes::pool::get_library,
        crate::routes::pool::add_candidate,
        crate::routes::pool::remove_candidate,
        crate::routes::pool::toggle_watched,
        crate::routes::pool::clear_pool,
        crate::routes::pool::update_filters,
        crate::routes::pool::update_prefs,
        crate::routes::pick::pick,
        crate::routes::pick::reroll,
        crate::routes::rooms::create_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::leave_room,
        crate::routes::rooms::delete_room,
        crate::routes::rooms::current_room,
        crate::routes::rooms::presence_touch,
        crate::routes::rooms::update_playback,
        crate::routes::messages::list_messages,
        crate::routes::messages::send_message,
        crate::routes::messages::toggle_reaction,
        crate::routes::messages::set_reply_draft,
        crate::routes::messages::clear_reply_draft,
        crate::routes::catalog::search,
        crate::routes::catalog::trending,
        crate::routes::catalog::details,
        crate::routes::catalog::genres,
        crate::routes::catalog::watch_providers,
        crate::routes::lists::list_collections,
        crate::routes::lists::create_collection,
        crate::routes::lists::delete_collection,
        crate::routes::lists::share_list,
        crate::routes::lists::import_shared_list,
    ),
    components(
        schemas(
            crate::dao::documents::Candidate,
            crate::dao::documents::MediaKind,
            crate::dao::documents::WatchFilters,
            crate::dao::documents::ProviderFilters,
            crate::dao::documents::Prefs,
            crate::dao::documents::LastPick,
            crate::dao::documents::PlaybackState,
            crate::dao::documents::MessageBody,
            crate::dao::documents::MessageDocument,
            crate::dao::documents::Mention,
            crate::dao::documents::ReplySnapshot,
            crate::dao::documents::ReplyPreview,
            crate::dao::documents::SavedCollection,
            crate::catalog::TrendingWindow,
            crate::catalog::models::PageResponse,
            crate::catalog::models::CatalogEntry,
            crate::catalog::models::TitleDetails,
            crate::catalog::models::Genre,
            crate::catalog::models::GenreList,
            crate::catalog::models::ProviderRef,
            crate::catalog::models::ProviderRegion,
            crate::catalog::models::WatchProviders,
            crate::state::library::Library,
            crate::state::room::Member,
            crate::state::chat::ChatMessage,
            crate::state::session::Identity,
            crate::dto::common::RoomPhaseSnapshot,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::Notice,
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::session::SignInRequest,
            crate::dto::session::SessionResponse,
            crate::dto::pool::LibraryResponse,
            crate::dto::pick::PickRequest,
            crate::dto::pick::PickResponse,
            crate::dto::rooms::RoomResponse,
            crate::dto::rooms::PlaybackRequest,
            crate::dto::rooms::PlaybackResponse,
            crate::dto::messages::SendMessageRequest,
            crate::dto::messages::ToggleReactionRequest,
            crate::dto::messages::ReplyDraftRequest,
            crate::dto::messages::MessagesResponse,
            crate::dto::collections::CreateCollectionRequest,
            crate::dto::collections::CollectionsResponse,
            crate::dto::collections::SharedListResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Identity sign-in and sign-out"),
        (name = "pool", description = "Pool, watched set, filters and preferences"),
        (name = "pick", description = "Random pick over the filtered pool"),
        (name = "rooms", description = "Room lifecycle, presence and playback"),
        (name = "messages", description = "Room chat, reactions and replies"),
        (name = "catalog", description = "Movie catalog search and discovery"),
        (name = "lists", description = "Saved collections and shared snapshots"),
        (name = "events", description = "Server-sent UI event stream"),
    )
)]
pub struct ApiDoc;
