use std::net::TcpListener;

use actix_web::{
    dev::Server,
    middleware::Logger,
    web::{self, Data},
    App, HttpServer,
};

use crate::{
    routes::{default_route, search_route},
    services::{orchestrator::SearchOrchestrator, run_control::RunRegistry},
};

pub fn run(
    listener: TcpListener,
    orchestrator: SearchOrchestrator,
    run_registry: RunRegistry,
) -> Result<Server, std::io::Error> {
    let orchestrator = Data::new(orchestrator);
    let run_registry = Data::new(run_registry);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::default)
            .service(
                web::scope("/lead")
                    .service(search_route::start_search)
                    .service(search_route::stop_search),
            )
            .app_data(orchestrator.clone())
            .app_data(run_registry.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
