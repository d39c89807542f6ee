#[actix_web::main]
async fn main() -> std::io::Result<()> {
    salary_mailer::run().await
}
