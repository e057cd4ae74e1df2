//! Canonical Python sources
//!
//! [`valid_source`] returns a candidate for any planned artifact that passes
//! every check of the default battery, provided its declared dependencies
//! were produced first.

use kiln_artifact::{ArtifactSpec, Persistence};

/// Candidate that fails the syntax check
pub const INVALID_SOURCE: &str = "def broken(:\n    return\n";

/// Candidate that parses but imports itself
pub fn self_importing_source(spec: &ArtifactSpec) -> String {
    format!("from {} import helper\n\n\ndef helper():\n    return 1\n", spec.module)
}

/// Valid candidate for a planned artifact
///
/// Unknown artifact names get a trivial module.
pub fn valid_source(spec: &ArtifactSpec) -> String {
    let ctx = &spec.context;
    let template = match (spec.name.as_str(), ctx.persistence) {
        ("config", _) => CONFIG,
        ("db-session", _) => DB_SESSION,
        ("base-model", Persistence::Sql) => BASE_MODEL,
        ("base-model", Persistence::MongoDb) => BASE_DOCUMENT,
        ("model", Persistence::Sql) => MODEL,
        ("model", Persistence::MongoDb) => DOCUMENT,
        ("schema", _) => SCHEMA,
        ("crud", _) => CRUD,
        ("endpoint", _) => ENDPOINT,
        ("router", _) if ctx.features.authentication => ROUTER_WITH_AUTH,
        ("router", _) => ROUTER,
        ("main", _) => MAIN,
        ("security", _) => SECURITY,
        ("user-model", Persistence::Sql) => USER_MODEL,
        ("user-model", Persistence::MongoDb) => USER_DOCUMENT,
        ("user-schema", _) => USER_SCHEMA,
        ("user-crud", _) => USER_CRUD,
        ("auth-dependency", _) => AUTH_DEPENDENCY,
        ("auth-endpoint", _) => AUTH_ENDPOINT,
        _ => "VALUE = 1\n",
    };

    let root = spec.module.root().unwrap_or("app");
    let fields = match ctx.persistence {
        Persistence::Sql => ctx
            .attributes
            .iter()
            .map(|a| format!("    {}: Mapped[{}] = mapped_column()\n", a.name, a.python_type))
            .collect::<String>(),
        Persistence::MongoDb => ctx
            .attributes
            .iter()
            .map(|a| format!("    {}: {}\n", a.name, a.python_type))
            .collect::<String>(),
    };
    let schema_fields = ctx
        .attributes
        .iter()
        .map(|a| format!("    {}: {}\n", a.name, a.python_type))
        .collect::<String>();

    template
        .replace("__FIELDS__\n", &fields)
        .replace("__SCHEMA_FIELDS__\n", &schema_fields)
        .replace("__ROOT__", root)
        .replace("__CLASS__", &ctx.class_name)
        .replace("__R__", &ctx.resource)
}

const CONFIG: &str = r#"from pydantic_settings import BaseSettings


class Settings(BaseSettings):
    project_name: str = "__R__ service"
    database_url: str = "sqlite:///./__R__.db"
    secret_key: str = "change-me"


settings = Settings()
"#;

const DB_SESSION: &str = r#"from sqlalchemy import create_engine
from sqlalchemy.orm import sessionmaker

from __ROOT__.core.config import settings

engine = create_engine(settings.database_url)
SessionLocal = sessionmaker(bind=engine, autoflush=False)


def get_db():
    db = SessionLocal()
    try:
        yield db
    finally:
        db.close()
"#;

const BASE_MODEL: &str = r#"from sqlalchemy.orm import DeclarativeBase


class Base(DeclarativeBase):
    pass
"#;

const BASE_DOCUMENT: &str = r#"from beanie import Document


class BaseDocument(Document):
    pass
"#;

const MODEL: &str = r#"from sqlalchemy.orm import Mapped, mapped_column

from __ROOT__.models.base_model import Base


class __CLASS__(Base):
    __tablename__ = "__R__s"

    id: Mapped[int] = mapped_column(primary_key=True)
__FIELDS__
"#;

const DOCUMENT: &str = r#"from __ROOT__.models.base_model import BaseDocument


class __CLASS__(BaseDocument):
__FIELDS__
    class Settings:
        name = "__R__s"
"#;

const SCHEMA: &str = r#"from pydantic import BaseModel, ConfigDict


class __CLASS__Base(BaseModel):
__SCHEMA_FIELDS__


class __CLASS__Create(__CLASS__Base):
    pass


class __CLASS__Read(__CLASS__Base):
    model_config = ConfigDict(from_attributes=True)

    id: int
"#;

const CRUD: &str = r#"from sqlalchemy.orm import Session

from __ROOT__.models.__R__ import __CLASS__
from __ROOT__.schemas.__R__ import __CLASS__Create


def get___R__(db: Session, item_id: int):
    return db.get(__CLASS__, item_id)


def create___R__(db: Session, payload: __CLASS__Create):
    item = __CLASS__(**payload.model_dump())
    db.add(item)
    db.commit()
    db.refresh(item)
    return item
"#;

const ENDPOINT: &str = r#"from fastapi import APIRouter, Depends, HTTPException
from sqlalchemy.orm import Session

from __ROOT__.crud import __R__ as crud
from __ROOT__.database.db_session import get_db
from __ROOT__.schemas.__R__ import __CLASS__Create, __CLASS__Read

router = APIRouter()


@router.post("/", response_model=__CLASS__Read, status_code=201)
def create___R__(payload: __CLASS__Create, db: Session = Depends(get_db)):
    return crud.create___R__(db, payload)


@router.get("/{item_id}", response_model=__CLASS__Read)
def read___R__(item_id: int, db: Session = Depends(get_db)):
    item = crud.get___R__(db, item_id)
    if item is None:
        raise HTTPException(status_code=404, detail="not found")
    return item
"#;

const ROUTER: &str = r#"from fastapi import APIRouter

from __ROOT__.api.endpoints import __R__

api_router = APIRouter()
api_router.include_router(__R__.router, prefix="/__R__s", tags=["__R__s"])
"#;

const ROUTER_WITH_AUTH: &str = r#"from fastapi import APIRouter

from __ROOT__.api.endpoints import __R__
from __ROOT__.api.endpoints import auth

api_router = APIRouter()
api_router.include_router(auth.router, prefix="/auth", tags=["auth"])
api_router.include_router(__R__.router, prefix="/__R__s", tags=["__R__s"])
"#;

const MAIN: &str = r#"from fastapi import FastAPI

from __ROOT__.api.router import api_router
from __ROOT__.core.config import settings

application = FastAPI(title=settings.project_name)
application.include_router(api_router)
"#;

const SECURITY: &str = r#"from datetime import datetime, timedelta, timezone

from jose import JWTError, jwt
from passlib.context import CryptContext

from __ROOT__.core.config import settings

pwd_context = CryptContext(schemes=["bcrypt"], deprecated="auto")


def hash_password(password: str) -> str:
    return pwd_context.hash(password)


def verify_password(password: str, hashed: str) -> bool:
    return pwd_context.verify(password, hashed)


def create_access_token(subject: str) -> str:
    expire = datetime.now(timezone.utc) + timedelta(minutes=30)
    claims = dict(sub=subject, exp=expire)
    return jwt.encode(claims, settings.secret_key, algorithm="HS256")


def decode_access_token(token: str):
    try:
        return jwt.decode(token, settings.secret_key, algorithms=["HS256"]).get("sub")
    except JWTError:
        return None
"#;

const USER_MODEL: &str = r#"from sqlalchemy.orm import Mapped, mapped_column

from __ROOT__.models.base_model import Base


class User(Base):
    __tablename__ = "users"

    id: Mapped[int] = mapped_column(primary_key=True)
    email: Mapped[str] = mapped_column(unique=True)
    hashed_password: Mapped[str] = mapped_column()
"#;

const USER_DOCUMENT: &str = r#"from __ROOT__.models.base_model import BaseDocument


class User(BaseDocument):
    email: str
    hashed_password: str

    class Settings:
        name = "users"
"#;

const USER_SCHEMA: &str = r#"from pydantic import BaseModel, ConfigDict


class UserCreate(BaseModel):
    email: str
    password: str


class UserRead(BaseModel):
    model_config = ConfigDict(from_attributes=True)

    id: int
    email: str


class Token(BaseModel):
    access_token: str
    token_type: str = "bearer"
"#;

const USER_CRUD: &str = r#"from sqlalchemy import select
from sqlalchemy.orm import Session

from __ROOT__.core.security import hash_password
from __ROOT__.models.user import User
from __ROOT__.schemas.user import UserCreate


def get_user_by_email(db: Session, email: str):
    return db.scalars(select(User).where(User.email == email)).first()


def create_user(db: Session, payload: UserCreate):
    user = User(email=payload.email, hashed_password=hash_password(payload.password))
    db.add(user)
    db.commit()
    db.refresh(user)
    return user
"#;

const AUTH_DEPENDENCY: &str = r#"from fastapi import Depends, HTTPException
from fastapi.security import OAuth2PasswordBearer
from sqlalchemy.orm import Session

from __ROOT__.core.security import decode_access_token
from __ROOT__.crud import user as user_crud
from __ROOT__.database.db_session import get_db

oauth2_scheme = OAuth2PasswordBearer(tokenUrl="/auth/token")


def get_current_user(token: str = Depends(oauth2_scheme), db: Session = Depends(get_db)):
    email = decode_access_token(token)
    user = user_crud.get_user_by_email(db, email) if email else None
    if user is None:
        raise HTTPException(status_code=401, detail="invalid token")
    return user
"#;

const AUTH_ENDPOINT: &str = r#"from fastapi import APIRouter, Depends, HTTPException
from fastapi.security import OAuth2PasswordRequestForm
from sqlalchemy.orm import Session

from __ROOT__.api.deps import get_current_user
from __ROOT__.core.security import create_access_token, verify_password
from __ROOT__.crud import user as user_crud
from __ROOT__.database.db_session import get_db
from __ROOT__.schemas.user import Token, UserCreate, UserRead

router = APIRouter()


@router.post("/register", response_model=UserRead, status_code=201)
def register(payload: UserCreate, db: Session = Depends(get_db)):
    return user_crud.create_user(db, payload)


@router.post("/token", response_model=Token, status_code=200)
def login(form: OAuth2PasswordRequestForm = Depends(), db: Session = Depends(get_db)):
    user = user_crud.get_user_by_email(db, form.username)
    if user is None or not verify_password(form.password, user.hashed_password):
        raise HTTPException(status_code=401, detail="invalid credentials")
    return Token(access_token=create_access_token(user.email))


@router.get("/me", response_model=UserRead)
def read_me(user: UserRead = Depends(get_current_user)):
    return user
"#;
